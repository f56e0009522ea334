//! Wire protocol for the Bitstamp live event feed
//!
//! Envelope grammar, event tags, channel names and the cost enrichment
//! applied to trade and order payloads. Everything in this module is pure
//! and stateless; connection state lives in the client.
//!
//! Outbound frames look like `{"event": "<tag>", "data": {...}}`, inbound
//! frames additionally carry a `channel` field on data and ack messages.

use serde::Deserialize;
use serde_json::{json, Value};

/// Client requests a channel subscription
pub const EVENT_SUBSCRIBE: &str = "bts:subscribe";
/// Client requests a channel unsubscription
pub const EVENT_UNSUBSCRIBE: &str = "bts:unsubscribe";
/// Heartbeat probe (client to server) and ack (server to client)
pub const EVENT_HEARTBEAT: &str = "bts:heartbeat";
/// Server acknowledged a subscribe request
pub const EVENT_SUBSCRIPTION_SUCCEEDED: &str = "bts:subscription_succeeded";
/// Server acknowledged an unsubscribe request
pub const EVENT_UNSUBSCRIPTION_SUCCEEDED: &str = "bts:unsubscription_succeeded";
/// Server asks the client to tear down and redial
pub const EVENT_REQUEST_RECONNECT: &str = "bts:request_reconnect";

/// Public trade stream
pub const CHANNEL_LIVE_TRADES: &str = "live_trades";
/// Public order stream
pub const CHANNEL_LIVE_ORDERS: &str = "live_orders";
/// Top-of-book snapshot stream
pub const CHANNEL_ORDER_BOOK: &str = "order_book";
/// Full order book snapshot stream
pub const CHANNEL_DETAIL_ORDER_BOOK: &str = "detail_order_book";
/// Order book delta stream
pub const CHANNEL_DIFF_ORDER_BOOK: &str = "diff_order_book";
/// Private order stream
pub const CHANNEL_MY_ORDERS: &str = "private-my_orders";
/// Private trade stream
pub const CHANNEL_MY_TRADES: &str = "private-my_trades";

const PRIVATE_PREFIX: &str = "private-";

/// One inbound wire message
///
/// `channel` is present on data and ack messages and absent on pure control
/// events such as the heartbeat ack. Not retained beyond the handling of a
/// single message.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Event tag used for dispatch
    pub event: String,
    /// Channel the message belongs to, when any
    #[serde(default)]
    pub channel: Option<String>,
    /// Opaque payload
    #[serde(default)]
    pub data: Value,
}

/// Parse inbound wire text
pub fn decode(text: &str) -> Result<Envelope, serde_json::Error> {
    serde_json::from_str(text)
}

/// Outbound subscribe request
///
/// `auth` carries the account token for private channels and is omitted for
/// public ones.
pub fn subscribe_request(channel: &str, auth: Option<&str>) -> String {
    let data = match auth {
        Some(token) => json!({ "channel": channel, "auth": token }),
        None => json!({ "channel": channel }),
    };
    json!({ "event": EVENT_SUBSCRIBE, "data": data }).to_string()
}

/// Outbound unsubscribe request
pub fn unsubscribe_request(channel: &str) -> String {
    json!({ "event": EVENT_UNSUBSCRIBE, "data": { "channel": channel } }).to_string()
}

/// Outbound heartbeat probe
pub fn heartbeat_probe() -> String {
    json!({ "event": EVENT_HEARTBEAT, "data": {} }).to_string()
}

/// Compute a channel name from its base and currency pair
///
/// Private channels additionally carry the account suffix:
/// `<base>_<pair>` for public channels, `<base>_<pair>-<user_id>` for
/// private ones.
pub fn channel_name(base: &str, currency_pair: &str, user_id: Option<&str>) -> String {
    match user_id {
        Some(uid) => format!("{base}_{currency_pair}-{uid}"),
        None => format!("{base}_{currency_pair}"),
    }
}

/// Whether a channel base belongs to a private channel family
pub fn is_private_base(base: &str) -> bool {
    base.starts_with(PRIVATE_PREFIX)
}

/// Whether messages on this channel get the derived cost field
pub fn carries_cost(channel: &str) -> bool {
    channel.starts_with(CHANNEL_LIVE_TRADES)
        || channel.starts_with(CHANNEL_LIVE_ORDERS)
        || channel.starts_with(CHANNEL_MY_ORDERS)
        || channel.starts_with(CHANNEL_MY_TRADES)
}

/// Attach `cost = amount * price` to a trade/order payload
///
/// Payloads missing either field, or carrying non-numeric values, are left
/// untouched: JSON has no NaN to carry a partial product.
pub fn enrich_cost(data: &mut Value) {
    let amount = data.get("amount").and_then(Value::as_f64);
    let price = data.get("price").and_then(Value::as_f64);
    if let (Some(amount), Some(price)) = (amount, price) {
        if let Some(object) = data.as_object_mut() {
            object.insert("cost".to_string(), json!(amount * price));
        }
    }
}
