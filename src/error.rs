use crate::analysis::resolver::ResolveError;
use crate::compute::ComputationError;
use crate::config::ConfigError;
use crate::grammar::ParseError;
use thiserror::Error;

/// Every way loading or running a model can fail.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// `omitted` counts missing names beyond those listed in `names`.
    #[error("Missing values for parameters: {}{}", names.join(", "), unlisted(*omitted))]
    MissingParameter { names: Vec<String>, omitted: usize },
    #[error("Parameter '{name}' must be finite, got {value}")]
    NonFiniteParameter { name: String, value: f64 },
    #[error("'{name}' is not a parameter of this model")]
    UnknownParameter { name: String },
    #[error("Arithmetic error in '{variable}' (simulation {simulation}, iteration {iteration}): {source}")]
    Arithmetic {
        variable: String,
        simulation: usize,
        iteration: usize,
        #[source]
        source: ComputationError,
    },
}

fn unlisted(omitted: usize) -> String {
    match omitted {
        0 => String::new(),
        n => format!(" and {} more", n),
    }
}
