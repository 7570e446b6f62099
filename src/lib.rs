/*!
# JsonApi

JsonApi is a small convention for signed JSON RPC over HTTP.

Requests are plain form or query parameters. The sender signs them with a shared secret: the parameters are normalized (every value a string, every map sorted with a natural case-insensitive collation), a random salt and a timestamp are mixed in, and the digest of the result travels with the request as `__jsonapi_sig`.

Responses are wrapped in a thin JSON envelope, `{"status":"ok","detail":{...}}` with HTTP 200 or `{"status":"fail","detail":{"errors":{...}}}` with HTTP 400. The client classifies every response, whatever the network handed back, into exactly one of Success, Failure or Error.

# Usage

```no_run
use jsonapi::client::Client;
use jsonapi::normalize::Params;
use jsonapi::signature::{Signer, DEFAULT_ALGORITHM};
use jsonapi::transport::MockTransport;

let signer = Signer::new("shared secret", DEFAULT_ALGORITHM)?;
let client = Client::new(MockTransport::new("localhost:8080")).with_signer(signer);

let mut params = Params::new();
params.insert("result".into(), "fifteen".into());
match client.post("/jsonapi_test", &params)?.into_detail() {
    Ok(detail) => println!("{:?}", detail),
    Err(err) => eprintln!("{}", err),
}
# Ok::<(), jsonapi::JsonApiError>(())
```

The binaries are `jsonapi`, a reference server, and `jsonapicli` for signing, verifying and classifying by hand.
*/
pub mod client;
pub mod envelope;
pub mod error;
pub mod networking;
pub mod normalize;
pub mod response;
pub mod server;
pub mod settings;
pub mod signature;
pub mod time;
pub mod transport;
pub mod util;
pub mod validator;

mod test_setup;

pub use error::{JsonApiError, ResponseError};

pub type Result<T> = std::result::Result<T, JsonApiError>;
