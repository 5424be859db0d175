use std::path::PathBuf;

use anyhow::{Context, Error};
use clap::Parser;
use clap_stdin::MaybeStdin;
use log::LevelFilter;
use serde_json::{Map, Value};
use xs2a_wizard::config::Configuration;
use xs2a_wizard::decoder::Decoder;
use xs2a_wizard::definitions::helpers::markup;
use xs2a_wizard::definitions::Payload;
use xs2a_wizard::transport::Sealer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    action: Action,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: LevelFilter,
}

#[derive(Debug, clap::Subcommand)]
enum Action {
    /// Print how a backend response is classified and which form lines it carries.
    Decode {
        /// Decrypted response JSON.
        response: MaybeStdin<String>,
        /// Configuration JSON whose feature flags the decoder follows.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Encrypt a request payload into the envelope posted to the backend.
    Seal {
        /// Request payload, a flat JSON object.
        payload: MaybeStdin<String>,
        #[arg(long)]
        session_key: String,
        /// PEM encoded public key to seal for instead of the backend key.
        #[arg(long)]
        public_key: Option<PathBuf>,
    },
    /// Print the segments of a label with inline markup.
    Markup { text: MaybeStdin<String> },
}

fn main() -> Result<(), Error> {
    let args = Args::parse();
    let _ = simplelog::SimpleLogger::init(args.log_level, simplelog::Config::default());

    let output = match args.action {
        Action::Decode { response, config } => decode(&response, config)?,
        Action::Seal {
            payload,
            session_key,
            public_key,
        } => seal(&payload, &session_key, public_key)?,
        Action::Markup { text } => print_markup(&text)?,
    };
    println!("{output}");
    Ok(())
}

fn decode(response: &str, config: Option<PathBuf>) -> Result<String, Error> {
    let decoder = match config {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("could not read {}", path.display()))?;
            let config: Configuration =
                serde_json::from_str(&json).context("could not parse configuration")?;
            Decoder::from(&config)
        }
        None => Decoder::default(),
    };
    let response = decoder
        .classify_slice(response.as_bytes())
        .context("could not decode response")?;
    Ok(serde_json::to_string_pretty(&response)?)
}

fn seal(payload: &str, session_key: &str, public_key: Option<PathBuf>) -> Result<String, Error> {
    let fields: Map<String, Value> =
        serde_json::from_str(payload).context("payload must be a JSON object")?;
    let sealer = match public_key {
        Some(path) => {
            let pem = std::fs::read_to_string(&path)
                .with_context(|| format!("could not read {}", path.display()))?;
            Sealer::from_public_key_pem(&pem).context("could not load public key")?
        }
        None => Sealer::backend().context("could not load backend key")?,
    };
    let envelope = sealer
        .seal(&Payload::from(fields), session_key)
        .context("could not seal payload")?;
    Ok(serde_json::to_string_pretty(&envelope)?)
}

fn print_markup(text: &str) -> Result<String, Error> {
    Ok(serde_json::to_string_pretty(&markup::parse(text))?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_login_page() {
        let output = decode(include_str!("../tests/data/login.json"), None).unwrap();
        let json: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["classification"]["kind"], "form_lines");
        assert_eq!(json["provider"], "testbank");
    }

    #[test]
    fn seal_with_test_key() {
        let key = PathBuf::from(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/data/test_rsa_public.pem"
        ));
        let output = seal(r#"{"action": "submit"}"#, "abc", Some(key)).unwrap();
        let json: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["key"], "abc");
        assert!(json["data"].as_str().unwrap().contains("::"));
    }

    #[test]
    fn markup_segments() {
        let output = print_markup("Read [this|bold]").unwrap();
        assert!(output.contains("bold"));
    }
}
