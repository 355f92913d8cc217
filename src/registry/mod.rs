pub mod template_registry;

pub use template_registry::{QueryParams, QueryTemplate, TemplateRegistry, TemplateRegistryConfig};
