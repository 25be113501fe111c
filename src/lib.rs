#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod mime;
pub mod models;
pub mod node;
pub mod packager;
pub mod pipeline;
pub mod registry;
pub mod tags;
pub mod templates;
pub mod urls;

pub use config::PipelineConfig;
pub use error::{ConfigError, PackageNotFound, PageError, RenderError, ResolveError, TagSyntaxError};
pub use models::{AssetType, Context, PackageDefinition, RenderMode, ResolvedPackage};
pub use node::{AssetNode, RenderEnv, RenderFragment};
pub use packager::{Packager, PackagerFactory, PackagerSettings, RegistryPackager};
pub use pipeline::AssetPipeline;
pub use registry::PackageRegistry;
pub use tags::{AssetTag, Page, PackageRef};
pub use templates::{TemplateLibrary, TemplateRenderer};
pub use urls::{StaticUrlResolver, UrlResolver};
