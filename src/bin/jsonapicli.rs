/*!
# JsonApi Command Line Interface

Sign parameter sets, check signatures and classify raw responses by hand.

## Usage

```bash
jsonapicli help [subcommand]
```

## Available subcommands

**sign**

sign key=value parameters and print the signed set as JSON

**verify**

check the signature of a JSON parameter object

**classify**

classify an HTTP status and body the way the client does

## Example

```bash
jsonapicli sign --key s3cret result=fifteen
jsonapicli verify --key s3cret '{"result":"fifteen","__jsonapi_salt":"...","__jsonapi_time":"...","__jsonapi_sig":"..."}'
jsonapicli classify --status 200 '{"status":"ok","detail":{"result":"fifteen"}}'
```
*/
use clap::{App, AppSettings, Arg, ArgMatches};
use jsonapi::{
    normalize::Params,
    response::{classify, ClassifiedResponse, HttpResponseRecord},
    signature::{FixedEntropy, Signer, DEFAULT_ALGORITHM},
    JsonApiError,
};
use serde_json::Value;

fn key_args<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    app.arg(
        Arg::with_name("key")
            .short("k")
            .long("key")
            .takes_value(true)
            .required(true)
            .help("shared signature secret"),
    )
    .arg(
        Arg::with_name("algorithm")
            .short("a")
            .long("algorithm")
            .takes_value(true)
            .default_value(DEFAULT_ALGORITHM)
            .help("digest algorithm"),
    )
}

fn signer_from(matches: &ArgMatches) -> jsonapi::Result<Signer> {
    let key = matches.value_of("key").unwrap_or_default();
    let algorithm = matches.value_of("algorithm").unwrap_or(DEFAULT_ALGORITHM);
    Signer::new(key, algorithm)
}

fn parse_pair(pair: &str) -> jsonapi::Result<(String, Value)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), Value::String(value.to_string()))),
        _ => Err(JsonApiError::InvalidArgument(format!(
            "expected key=value, got \"{}\"",
            pair
        ))),
    }
}

fn sign(matches: &ArgMatches) -> jsonapi::Result<()> {
    let mut signer = signer_from(matches)?;
    if let (Some(salt), Some(time)) = (matches.value_of("salt"), matches.value_of("time")) {
        let time = time.parse::<u64>().map_err(|_| {
            JsonApiError::InvalidArgument(format!("time must be seconds since the epoch, got \"{}\"", time))
        })?;
        signer = signer.with_entropy(FixedEntropy::new(salt, time));
    }

    let mut params = Params::new();
    for pair in matches.values_of("params").into_iter().flatten() {
        let (key, value) = parse_pair(pair)?;
        params.insert(key, value);
    }

    let signed = signer.sign_params(&params, false)?;
    println!("{}", serde_json::to_string_pretty(&signed)?);
    Ok(())
}

fn verify(matches: &ArgMatches) -> jsonapi::Result<bool> {
    let signer = signer_from(matches)?;
    let params: Value = serde_json::from_str(matches.value_of("json").unwrap_or_default())?;
    let valid = signer.verify(&params)?;
    println!("{}", if valid { "valid" } else { "invalid" });
    Ok(valid)
}

fn classify_body(matches: &ArgMatches) -> jsonapi::Result<()> {
    let status = matches
        .value_of("status")
        .unwrap_or_default()
        .parse::<u16>()
        .map_err(|_| JsonApiError::InvalidArgument(String::from("status must be an HTTP status code")))?;
    let uri = matches.value_of("uri").unwrap_or_default();
    let body = matches.value_of("body").unwrap_or_default();

    let response = classify(HttpResponseRecord::new(uri, status, body.as_bytes()));
    match response.classified() {
        ClassifiedResponse::Success { detail } => {
            println!("success");
            println!("{}", serde_json::to_string_pretty(detail)?);
        }
        ClassifiedResponse::Failure { errors } => {
            println!("failure");
            println!("{}", serde_json::to_string_pretty(errors)?);
        }
        ClassifiedResponse::Error { .. } => {
            println!("error");
            println!("{}", response.to_error(None)?);
        }
    }
    Ok(())
}

pub fn main() -> jsonapi::Result<()> {
    tracing_subscriber::fmt::init();

    let command_matches = App::new("JsonApi Command Line Interface")
        .about("Sign and verify JsonApi requests, classify JsonApi responses")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            key_args(App::new("sign").about("signs key=value parameters"))
                .arg(
                    Arg::with_name("salt")
                        .long("salt")
                        .takes_value(true)
                        .requires("time")
                        .help("fixed salt instead of a random one"),
                )
                .arg(
                    Arg::with_name("time")
                        .long("time")
                        .takes_value(true)
                        .requires("salt")
                        .help("fixed timestamp instead of the current time"),
                )
                .arg(
                    Arg::with_name("params")
                        .multiple(true)
                        .help("parameters as key=value"),
                ),
        )
        .subcommand(
            key_args(App::new("verify").about("verifies a signed JSON parameter object")).arg(
                Arg::with_name("json")
                    .required(true)
                    .help("signed parameters as a JSON object"),
            ),
        )
        .subcommand(
            App::new("classify")
                .about("classifies an HTTP response")
                .arg(
                    Arg::with_name("status")
                        .short("s")
                        .long("status")
                        .takes_value(true)
                        .required(true)
                        .help("HTTP status code"),
                )
                .arg(
                    Arg::with_name("uri")
                        .short("u")
                        .long("uri")
                        .takes_value(true)
                        .default_value("http://localhost/")
                        .help("requested URI, for error reports"),
                )
                .arg(
                    Arg::with_name("body")
                        .required(true)
                        .help("response body"),
                ),
        )
        .get_matches();

    if let Some(matches) = command_matches.subcommand_matches("sign") {
        sign(matches)?;
    }
    if let Some(matches) = command_matches.subcommand_matches("verify") {
        if !verify(matches)? {
            std::process::exit(1);
        }
    }
    if let Some(matches) = command_matches.subcommand_matches("classify") {
        classify_body(matches)?;
    }
    Ok(())
}
