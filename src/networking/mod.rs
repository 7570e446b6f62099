/*!

# Server-side Interfaces

## Introduction

A JsonApi endpoint receives form-encoded parameters, usually signed, and answers with one of the two JSON envelopes:

```text
200  {"status":"ok","detail":{...}}
400  {"status":"fail","detail":{"errors":{"param":"message"}}}
```

## Signed requests

Signed requests carry three reserved parameters:

```text
__jsonapi_salt   40 hex characters of random salt
__jsonapi_time   seconds since the epoch
__jsonapi_sig    hex digest over the other parameters, the salt and the time
```

The `signed_form` filter checks them with a `SignatureValidator` before the route ever sees the request. A request that fails the check is answered with a fail envelope whose errors are keyed by `__jsonapi_sig`.

Form bodies are flat. Nested client params arrive as `key[sub]` names and are rebuilt with `unflatten_params` before the signature is checked, so the server digests the same structure the client signed.

*/
pub mod filters;
pub mod handlers;
pub mod signals;
