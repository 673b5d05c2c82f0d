use std::{num::ParseIntError, path::PathBuf};

use crate::report::DEFAULT_OUTPUT_FILENAME;

pub const USAGE: &str =
    "usage: delivery-window --input_file <events.json> --window_size <minutes> [--output_file <path>]";

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("help requested")]
    Help,
    #[error("missing required argument {0}")]
    MissingArgument(&'static str),
    #[error("missing value for {0}")]
    MissingValue(String),
    #[error("unknown argument {0:?}")]
    UnknownArgument(String),
    #[error("--window_size must be a whole number of minutes, got {value:?}: {source}")]
    InvalidWindowSize {
        value: String,
        source: ParseIntError,
    },
    #[error("The file {} does not exist!", .0.display())]
    InputNotFound(PathBuf),
}

/// Options for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub input_file: PathBuf,
    /// Only checked to be a number here, the window rejects a size of 0.
    pub window_size: usize,
    pub output_file: PathBuf,
}

impl CliError {
    /// Whether the usage line should be shown alongside the error.
    pub fn is_usage_error(&self) -> bool {
        !matches!(self, CliError::InputNotFound(_))
    }
}

impl CliArgs {
    /// Parses the arguments following the program name. Flags take their value
    /// either as the next argument or after an `=`.
    pub fn parse_from<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut input_file = None;
        let mut window_size = None;
        let mut output_file = None;

        while let Some(arg) = args.next() {
            if arg == "-h" || arg == "--help" {
                return Err(CliError::Help);
            }

            let (flag, inline_value) = match arg.split_once('=') {
                Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
                None => (arg.clone(), None),
            };
            let target = match flag.as_str() {
                "--input_file" => &mut input_file,
                "--window_size" => &mut window_size,
                "--output_file" => &mut output_file,
                _ => return Err(CliError::UnknownArgument(flag.clone())),
            };
            let value = inline_value
                .or_else(|| args.next())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| CliError::MissingValue(flag.clone()))?;
            *target = Some(value);
        }

        let input_file = input_file.ok_or(CliError::MissingArgument("--input_file"))?;
        let window_size = window_size.ok_or(CliError::MissingArgument("--window_size"))?;
        let window_size = window_size
            .trim()
            .parse::<usize>()
            .map_err(|source| CliError::InvalidWindowSize {
                value: window_size.clone(),
                source,
            })?;

        Ok(CliArgs {
            input_file: PathBuf::from(input_file),
            window_size,
            output_file: PathBuf::from(
                output_file.unwrap_or_else(|| DEFAULT_OUTPUT_FILENAME.to_string()),
            ),
        })
    }

    pub fn ensure_input_exists(&self) -> Result<(), CliError> {
        if self.input_file.exists() {
            Ok(())
        } else {
            Err(CliError::InputNotFound(self.input_file.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, CliError> {
        CliArgs::parse_from(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn test_parse_separate_values() {
        let args = parse(&["--input_file", "events.json", "--window_size", "10"]).unwrap();
        assert_eq!(
            args,
            CliArgs {
                input_file: PathBuf::from("events.json"),
                window_size: 10,
                output_file: PathBuf::from(DEFAULT_OUTPUT_FILENAME),
            }
        );
    }

    #[test]
    fn test_parse_inline_values() {
        let args = parse(&[
            "--window_size=3",
            "--output_file=/tmp/averages.json",
            "--input_file=events.json",
        ])
        .unwrap();
        assert_eq!(args.window_size, 3);
        assert_eq!(args.input_file, PathBuf::from("events.json"));
        assert_eq!(args.output_file, PathBuf::from("/tmp/averages.json"));
    }

    #[test]
    fn test_last_value_wins() {
        let args = parse(&[
            "--input_file",
            "a.json",
            "--window_size",
            "1",
            "--window_size",
            "5",
        ])
        .unwrap();
        assert_eq!(args.window_size, 5);
    }

    #[test]
    fn test_zero_window_is_left_to_the_window() {
        let args = parse(&["--input_file", "a.json", "--window_size", "0"]).unwrap();
        assert_eq!(args.window_size, 0);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse(&[]), Err(CliError::MissingArgument("--input_file"))));
        assert!(matches!(
            parse(&["--input_file", "a.json"]),
            Err(CliError::MissingArgument("--window_size"))
        ));
        assert!(matches!(
            parse(&["--input_file", "a.json", "--window_size"]),
            Err(CliError::MissingValue(flag)) if flag == "--window_size"
        ));
        assert!(matches!(
            parse(&["--input_file=", "--window_size", "2"]),
            Err(CliError::MissingValue(flag)) if flag == "--input_file"
        ));
        assert!(matches!(
            parse(&["--input_file", "a.json", "--window_size", "ten"]),
            Err(CliError::InvalidWindowSize { value, .. }) if value == "ten"
        ));
        assert!(matches!(
            parse(&["--input_file", "a.json", "--window_size", "-1"]),
            Err(CliError::InvalidWindowSize { .. })
        ));
        assert!(matches!(
            parse(&["--input", "a.json"]),
            Err(CliError::UnknownArgument(arg)) if arg == "--input"
        ));
        assert!(matches!(parse(&["--window_size", "2", "-h"]), Err(CliError::Help)));
    }

    #[test]
    fn test_usage_errors() {
        assert!(parse(&["--window_size", "2"]).unwrap_err().is_usage_error());
        assert!(!CliError::InputNotFound(PathBuf::from("a.json")).is_usage_error());
    }

    #[test]
    fn test_ensure_input_exists() {
        let missing = env::temp_dir().join(format!("missing-{}.json", ulid::Ulid::new()));
        let args = CliArgs {
            input_file: missing.clone(),
            window_size: 1,
            output_file: PathBuf::from(DEFAULT_OUTPUT_FILENAME),
        };
        let err = args.ensure_input_exists().unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("The file {} does not exist!", missing.display())
        );

        let present = CliArgs {
            input_file: env::temp_dir(),
            ..args
        };
        assert!(present.ensure_input_exists().is_ok());
    }
}
