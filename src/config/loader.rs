use std::path::Path;

use super::{AppConfig, ConfigError};

/// Load configuration from a YAML file, expanding `${VAR}` references first
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    let content = resolve_variables(&content)?;
    let config: AppConfig = serde_yaml::from_str(&content)?;
    config.validate()?;

    Ok(config)
}

/// Replace `${NAME}` with the value of environment variable NAME.
///
/// An unterminated or empty reference is kept literally.
pub fn resolve_variables(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find('}') {
            Some(0) | None => {
                result.push_str("${");
                rest = after;
            }
            Some(end) => {
                let name = &after[..end];
                let value = std::env::var(name).map_err(|_| ConfigError::UndefinedVariable {
                    name: name.to_string(),
                })?;
                result.push_str(&value);
                rest = &after[end + 1..];
            }
        }
    }
    result.push_str(rest);

    Ok(result)
}
