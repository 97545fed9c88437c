//! Directive collection: scanning, parsing and binding to target lines.

pub mod collector;
pub mod directive;
pub mod scanner;

pub use collector::{AnnotationCollector, FileAnnotations};
pub use directive::{Annotation, ArgForm, ArgValue, ConfigSpec, Directive, RouteSpec};
