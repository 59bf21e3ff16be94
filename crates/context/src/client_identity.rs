/// Represents the identified caller of a request, as established by the
/// transport's auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// The client identifier (API key id, basic-auth username, or JWT `sub`).
    pub client_id: String,
    /// An optional free-form group/tier label carried by the auth mode.
    pub group: Option<String>,
}
