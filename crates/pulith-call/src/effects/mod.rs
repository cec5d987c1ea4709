//! I/O and concurrency: the call contract, response bodies, the stream and
//! await bridges, progress decoration, decoding and the network client.

mod body;
mod call;
mod decode;
mod future;
mod http;
pub mod mock;
mod progress;
mod response;
mod stream;
mod subscriptions;

pub use body::{Body, BoxRead};
pub use call::{Call, CallExt, CallFactory, CallFactoryExt, Completion};
pub use decode::parse_as;
pub use future::ResponseFuture;
#[cfg(feature = "reqwest")]
pub use http::{ReqwestCall, ReqwestClient};
pub use progress::{ProgressCall, ProgressReader};
pub use response::Response;
pub use stream::{ResponseStream, Subscriber, Subscription};
pub use subscriptions::Subscriptions;
