/*!
# JsonApi Reference Server

## Help

```bash
jsonapi --help
```

## Example Usage

```bash
JSONAPI_SIGNATURE__SECRET=s3cret jsonapi --config config/jsonapi
```

## Dev

To run from source:

```bash
cargo run -- --help
JSONAPI_SIGNATURE__SECRET=s3cret cargo run -- --config config/jsonapi
```
*/
use clap::{App, Arg};
use jsonapi::networking::signals::signal_for_shutdown;
use jsonapi::{server, settings::Settings};

#[tokio::main]
pub async fn main() -> jsonapi::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = App::new("JsonApi Server")
        .about("Serves the JsonApi echo endpoint and checks request signatures")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .help("config file name"),
        )
        .get_matches();

    let settings = Settings::load(matches.value_of("config"))?;

    server::run(settings, signal_for_shutdown()).await
}
