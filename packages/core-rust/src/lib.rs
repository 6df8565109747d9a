//! `Formgate` Core: typed form schemas, lenient casting, requirement
//! checking and recursive validation with precise error locations.

pub mod binary;
pub mod caster;
pub mod config;
pub mod data;
pub mod error;
pub mod path;
pub mod requirement;
pub mod schema;
pub mod scope;
pub mod types;
pub mod validator;
pub mod value;

pub use binary::{parse_binary, BinarySource, BinaryValue};
pub use caster::cast;
pub use config::{ValidationConfig, ValidationMode};
pub use data::{FormData, FromValue};
pub use error::{DeclarationError, FormError};
pub use path::{FieldPath, MapSide, PathSegment};
pub use requirement::{CompositeMode, Pattern, Requirement};
pub use schema::{schema_of, Field, FieldRef, Form, FormSchema, FormType};
pub use scope::AccessScope;
pub use types::{EnumType, PreProcessor, Type, TypeKind, TypeTag};
pub use validator::{validate, validate_schema};
pub use value::{EnumConstant, Value, ValueKind, ValueMap};
