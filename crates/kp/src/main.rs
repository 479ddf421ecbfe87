use std::{error::Error as StdError, process::ExitCode};

use clap::Parser;
use kpack_client::logging;

mod cli;
mod commands;
mod output;

const APP_NAME: &str = "kp";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    if let Err(error) = logging::initialize_logging("KP_LOG", APP_NAME) {
        eprintln!("{}", error_report(&error));
        return ExitCode::FAILURE;
    }

    let opts = cli::Opts::parse();
    match commands::run(opts).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::debug!(?error, "command failed");
            eprintln!("{}", error_report(&error));
            ExitCode::FAILURE
        }
    }
}

/// Formats `error` and its sources on one line: `Error: outer: inner: root cause`.
fn error_report(error: &(dyn StdError + 'static)) -> String {
    let chain: Vec<String> = std::iter::successors(Some(error), |error| (*error).source())
        .map(ToString::to_string)
        .collect();
    format!("Error: {}", chain.join(": "))
}

#[cfg(test)]
mod tests {
    use kpack_client::client;
    use snafu::Snafu;

    use super::*;

    #[derive(Debug, Snafu)]
    #[snafu(display("failed to save image {name:?}"))]
    struct SaveImageError {
        source: client::Error,
        name: String,
    }

    #[test]
    fn reports_the_whole_chain() {
        let error = SaveImageError {
            source: client::Error::Conflict {
                kind: "Image".to_owned(),
                name: "petclinic".to_owned(),
            },
            name: "petclinic".to_owned(),
        };

        assert_eq!(
            error_report(&error),
            "Error: failed to save image \"petclinic\": Image \"petclinic\" was modified by \
             someone else since it was read, run the command again"
        );
    }
}
