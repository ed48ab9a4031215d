//! Splitting whole documents into cells.

use quarto_source_map::as_mapped_string;
use quarto_yaml_intelligence::{CellType, break_quarto_md};
use serde_json::json;

const REPORT: &str = r#"---
title: Report
---

Some text.

```{ojs}
//| label: fig-plot
//| echo: false
Plot.plot()
```

$$
x^2
$$
"#;

#[test]
fn test_report_cells() {
    let doc = as_mapped_string(REPORT);
    let chunks = break_quarto_md(&doc).unwrap();

    let types: Vec<_> = chunks.cells.iter().map(|c| c.cell_type.clone()).collect();
    assert_eq!(
        types,
        vec![
            CellType::Raw,
            CellType::Markdown,
            CellType::Code {
                language: "ojs".to_string()
            },
            CellType::Math,
        ]
    );

    let markdown = &chunks.cells[1];
    assert_eq!(markdown.source.value(), "\nSome text.\n\n");
    assert_eq!(markdown.cell_start_line, 3);

    let math = &chunks.cells[3];
    assert_eq!(math.source.value(), "$$\nx^2\n$$\n");
    assert_eq!(math.cell_start_line, 12);
}

#[test]
fn test_ojs_cell_options() {
    let doc = as_mapped_string(REPORT);
    let chunks = break_quarto_md(&doc).unwrap();
    let cell = &chunks.cells[2];

    assert_eq!(cell.id.as_deref(), Some("fig-plot"));
    assert_eq!(cell.options, Some(json!({"label": "fig-plot", "echo": false})));
    assert_eq!(
        cell.options_yaml.as_ref().unwrap().value(),
        "label: fig-plot\necho: false\n"
    );
    assert_eq!(cell.source.value(), "Plot.plot()\n");
    assert_eq!(cell.source_start_line, 2);
    assert_eq!(cell.cell_start_line, 7);
    assert_eq!(
        cell.source_with_options.value(),
        "//| label: fig-plot\n//| echo: false\nPlot.plot()\n"
    );

    // positions inside the cell point back into the document
    assert_eq!(cell.source.map(0), REPORT.find("Plot.plot()"));
    let verbatim = cell.source_verbatim.value();
    assert_eq!(&verbatim[cell.source_offset..], "Plot.plot()\n```\n");
}

#[test]
fn test_other_languages_keep_their_options_in_the_source() {
    let doc = as_mapped_string("```{r}\n#| echo: false\nplot(cars)\n```\n");
    let chunks = break_quarto_md(&doc).unwrap();
    let cell = &chunks.cells[0];
    assert!(cell.options.is_none());
    assert_eq!(cell.source.value(), "#| echo: false\nplot(cars)\n");
}
