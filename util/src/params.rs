//! Parameter file loading
//!
//! Parameter files are TOML and live in `$QUADTRACK_SW_ROOT/params`. Any
//! structure implementing `Deserialize` can be loaded from one.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable (QUADTRACK_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot load the parameter file {0:?}: {1}")]
    FileLoadError(PathBuf, std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// The directory holding the parameter files.
pub fn params_dir() -> Result<PathBuf, LoadError> {
    let mut path = crate::host::get_sw_root().map_err(|_| LoadError::SwRootNotSet)?;
    path.push("params");
    Ok(path)
}

/// Load a parameter file by name, relative to [`params_dir`].
pub fn load<P>(param_file_name: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    load_path(params_dir()?.join(param_file_name))
}

/// Load a parameter file from an explicit path.
pub fn load_path<P, A>(path: A) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    A: AsRef<Path>,
{
    let path = path.as_ref();
    let params_str =
        read_to_string(path).map_err(|e| LoadError::FileLoadError(path.to_path_buf(), e))?;

    from_str(&params_str)
}

/// Parse parameters from the contents of a parameter file.
pub fn from_str<P>(params_str: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    toml::from_str(params_str).map_err(LoadError::DeserialiseError)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Example {
        period_s: f64,
        name: String,
    }

    #[test]
    fn test_from_str() {
        let e: Example = from_str("period_s = 0.5\nname = \"gentle\"\n").unwrap();
        assert_eq!(
            e,
            Example {
                period_s: 0.5,
                name: "gentle".into()
            }
        );

        assert!(matches!(
            from_str::<Example>("period_s = \"fast\""),
            Err(LoadError::DeserialiseError(_))
        ));
    }

    #[test]
    fn test_load_path() {
        let path = std::env::temp_dir().join("quadtrack_params_test.toml");
        std::fs::write(&path, "period_s = 10.0\nname = \"battery\"\n").unwrap();

        let e: Example = load_path(&path).unwrap();
        assert_eq!(e.period_s, 10.0);

        std::fs::remove_file(&path).ok();

        assert!(matches!(
            load_path::<Example, _>(&path),
            Err(LoadError::FileLoadError(_, _))
        ));
    }
}
