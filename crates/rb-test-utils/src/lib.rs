// rb-test-utils: shared test harness for exercising the broker's
// WebSocket surfaces end to end.

pub mod free_port;
pub mod mock_client;
pub mod mock_proxy_link;

pub use free_port::free_port;
pub use mock_client::MockClient;
pub use mock_proxy_link::MockProxyLink;
