//! Tooling context - long-lived state shared by every request
//!
//! Holds the schema bundle (loaded once, on first use), the tree-sitter
//! parser, the compiled validators and one [`PromiseQueue`] per schema.
//! Nothing is ever evicted.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use quarto_yaml::YamlParser;
use quarto_yaml_validation::{SchemaRegistry, YamlSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::cell_options::{CommentSyntax, CommentTable};
use crate::error::{Result, ToolingError};
use crate::queue::PromiseQueue;

pub const FRONT_MATTER_SCHEMA: &str = "front-matter";
pub const CONFIG_SCHEMA: &str = "config";

/// The schemas and definitions the tooling validates against.
///
/// ```json
/// {
///   "schemas": {
///     "front-matter": {...},
///     "config": {...},
///     "languages": {"r": {"schema": {...}}}
///   },
///   "definitions": {"date": {...}},
///   "lang-comment-chars": {"q": "/"}
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaBundle {
    pub schemas: BundleSchemas,
    /// Schemas referenced by `$ref`, keyed by id
    #[serde(default)]
    pub definitions: Value,
    /// Additions to the built-in comment table
    #[serde(default, rename = "lang-comment-chars")]
    pub lang_comment_chars: HashMap<String, CommentSyntax>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleSchemas {
    #[serde(rename = "front-matter")]
    pub front_matter: Value,
    pub config: Value,
    /// Cell option schemas by language
    #[serde(default)]
    pub languages: HashMap<String, LanguageSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageSchema {
    pub schema: Value,
}

impl SchemaBundle {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// The schema registered under `name`: `front-matter`, `config`, or a
    /// language.
    pub fn schema(&self, name: &str) -> Option<&Value> {
        match name {
            FRONT_MATTER_SCHEMA => Some(&self.schemas.front_matter),
            CONFIG_SCHEMA => Some(&self.schemas.config),
            language => self.schemas.languages.get(language).map(|l| &l.schema),
        }
    }
}

/// Where the schema bundle comes from.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn load(&self) -> Result<SchemaBundle>;
}

/// Reads the bundle from a JSON file.
#[derive(Debug, Clone)]
pub struct FileSchemaSource {
    path: PathBuf,
}

impl FileSchemaSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SchemaSource for FileSchemaSource {
    async fn load(&self) -> Result<SchemaBundle> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ToolingError::BundleIo {
                path: self.path.clone(),
                source,
            })?;
        SchemaBundle::from_json(&text)
    }
}

/// A bundle already in memory.
#[derive(Debug, Clone)]
pub struct StaticSchemaSource {
    bundle: SchemaBundle,
}

impl StaticSchemaSource {
    pub fn new(bundle: SchemaBundle) -> Self {
        Self { bundle }
    }
}

#[async_trait]
impl SchemaSource for StaticSchemaSource {
    async fn load(&self) -> Result<SchemaBundle> {
        Ok(self.bundle.clone())
    }
}

/// A bundle with its definitions registered.
#[derive(Debug)]
pub struct LoadedBundle {
    pub bundle: SchemaBundle,
    pub registry: Arc<SchemaRegistry>,
    pub comments: CommentTable,
}

impl LoadedBundle {
    fn new(bundle: SchemaBundle) -> Result<Self> {
        let registry = SchemaRegistry::from_definitions(&bundle.definitions)?;
        let comments = CommentTable::with_overrides(bundle.lang_comment_chars.clone());
        info!(definitions = registry.len(), "Loaded schema bundle");
        Ok(LoadedBundle {
            bundle,
            registry: Arc::new(registry),
            comments,
        })
    }

    pub fn has_schema(&self, name: &str) -> bool {
        self.bundle.schema(name).is_some()
    }
}

type ValidatorCache = HashMap<String, Arc<YamlSchema>>;

/// State shared by all lint and completion requests.
///
/// Requests for the same schema run one at a time, in arrival order, with
/// newer requests dropping the ones still waiting. Requires a tokio runtime.
pub struct ToolingContext {
    source: Box<dyn SchemaSource>,
    bundle: OnceCell<Arc<LoadedBundle>>,
    parser: Arc<Mutex<YamlParser>>,
    validators: Arc<Mutex<ValidatorCache>>,
    queues: Mutex<HashMap<String, PromiseQueue>>,
}

impl std::fmt::Debug for ToolingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolingContext")
            .field("bundle_loaded", &self.bundle.initialized())
            .field("validators", &lock(&self.validators).len())
            .finish_non_exhaustive()
    }
}

impl ToolingContext {
    /// Create a context that loads its bundle from `source` when first
    /// needed.
    ///
    /// Fails when the YAML grammar cannot be loaded.
    pub fn new(source: impl SchemaSource + 'static) -> Result<Self> {
        Ok(ToolingContext {
            source: Box::new(source),
            bundle: OnceCell::new(),
            parser: Arc::new(Mutex::new(YamlParser::new()?)),
            validators: Arc::new(Mutex::new(HashMap::new())),
            queues: Mutex::new(HashMap::new()),
        })
    }

    /// The loaded bundle.
    pub async fn bundle(&self) -> Result<Arc<LoadedBundle>> {
        self.bundle
            .get_or_try_init(|| async {
                let bundle = self.source.load().await?;
                Ok::<_, ToolingError>(Arc::new(LoadedBundle::new(bundle)?))
            })
            .await
            .cloned()
    }

    /// Run `task` with the validator for `schema_name` and the parser, on
    /// the schema's queue.
    ///
    /// The validator is compiled on first use. Tasks for the same schema
    /// that are still waiting are cancelled.
    pub async fn with_validator<F, T>(&self, schema_name: &str, task: F) -> Result<T>
    where
        F: FnOnce(&YamlSchema, &mut YamlParser) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let bundle = self.bundle().await?;
        let queue = self.queue(schema_name);
        let validators = self.validators.clone();
        let parser = self.parser.clone();
        let name = schema_name.to_string();

        queue
            .enqueue(
                move || async move {
                    let validator = validator_for(&validators, &bundle, &name)?;
                    let mut parser = lock(&parser);
                    task(&validator, &mut parser)
                },
                true,
            )
            .await?
    }

    fn queue(&self, schema_name: &str) -> PromiseQueue {
        lock(&self.queues)
            .entry(schema_name.to_string())
            .or_insert_with(|| PromiseQueue::new(schema_name))
            .clone()
    }
}

fn validator_for(
    validators: &Mutex<ValidatorCache>,
    bundle: &LoadedBundle,
    name: &str,
) -> Result<Arc<YamlSchema>> {
    if let Some(validator) = lock(validators).get(name) {
        return Ok(validator.clone());
    }
    let schema = bundle
        .bundle
        .schema(name)
        .ok_or_else(|| ToolingError::UnknownSchema(name.to_string()))?;
    let validator = Arc::new(YamlSchema::new(schema, bundle.registry.clone())?);
    debug!(schema = name, "Compiled validator");
    lock(validators).insert(name.to_string(), validator.clone());
    Ok(validator)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle() -> SchemaBundle {
        serde_json::from_value(json!({
            "schemas": {
                "front-matter": {"type": "object", "properties": {"title": {"type": "string"}}},
                "config": {"type": "object"},
                "languages": {"r": {"schema": {"type": "object"}}}
            },
            "definitions": {"date": {"type": "string"}},
            "lang-comment-chars": {"q": "/"}
        }))
        .unwrap()
    }

    #[test]
    fn test_bundle_schema_lookup() {
        let bundle = bundle();
        assert!(bundle.schema("front-matter").is_some());
        assert!(bundle.schema("config").is_some());
        assert!(bundle.schema("r").is_some());
        assert!(bundle.schema("python").is_none());
        assert_eq!(bundle.lang_comment_chars["q"], CommentSyntax::Line("/".to_string()));
    }

    #[tokio::test]
    async fn test_bundle_is_loaded_once() {
        let context = ToolingContext::new(StaticSchemaSource::new(bundle())).unwrap();
        let first = context.bundle().await.unwrap();
        let second = context.bundle().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.registry.len(), 1);
        assert_eq!(first.comments.get("q").option_prefix(), "/| ");
    }

    #[tokio::test]
    async fn test_validators_are_cached() {
        let context = ToolingContext::new(StaticSchemaSource::new(bundle())).unwrap();
        context
            .with_validator("front-matter", |_, _| Ok(()))
            .await
            .unwrap();
        context
            .with_validator("front-matter", |_, _| Ok(()))
            .await
            .unwrap();
        assert_eq!(lock(&context.validators).len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_schema() {
        let context = ToolingContext::new(StaticSchemaSource::new(bundle())).unwrap();
        let result = context.with_validator("python", |_, _| Ok(())).await;
        assert!(matches!(result, Err(ToolingError::UnknownSchema(name)) if name == "python"));
    }

    #[tokio::test]
    async fn test_missing_bundle_file() {
        let context = ToolingContext::new(FileSchemaSource::new("/nonexistent/bundle.json")).unwrap();
        assert!(matches!(context.bundle().await, Err(ToolingError::BundleIo { .. })));
    }
}
