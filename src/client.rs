use tracing::{event, Level};

use crate::normalize::Params;
use crate::response::{classify, ApiResponse};
use crate::signature::Signer;
use crate::transport::{check_form_keys, Method, Transport};

/// Sends JsonApi calls through a transport and classifies the answers.
///
/// Each client owns its transport; services that talk to several servers
/// just build several clients.
#[derive(Debug)]
pub struct Client<T: Transport> {
    transport: T,
    signer: Option<Signer>,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Client<T> {
        Client {
            transport,
            signer: None,
        }
    }

    /// Sign every outgoing request with `signer`.
    pub fn with_signer(mut self, signer: Signer) -> Client<T> {
        self.signer = Some(signer);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Swap the transport, returning the previous one.
    pub fn set_transport(&mut self, transport: T) -> T {
        std::mem::replace(&mut self.transport, transport)
    }

    pub fn get(&self, path: &str, params: &Params) -> crate::Result<ApiResponse> {
        self.call(Method::Get, path, params)
    }

    pub fn post(&self, path: &str, params: &Params) -> crate::Result<ApiResponse> {
        self.call(Method::Post, path, params)
    }

    /// Sign (if configured), send and classify one request.
    ///
    /// Only signing and transport problems, and parameter names a form
    /// cannot carry, are returned as errors; anything the server answers is
    /// classified.
    pub fn call(&self, method: Method, path: &str, params: &Params) -> crate::Result<ApiResponse> {
        check_form_keys(params)?;
        let params = match &self.signer {
            Some(signer) => signer.sign_params(params, false)?,
            None => params.clone(),
        };
        event!(Level::DEBUG, "{} {} ({} params)", method, path, params.len());
        let record = self.transport.send(method, path, &params)?;
        Ok(classify(record))
    }
}
