/// Rewrites raw-socket schemes to the transport scheme the session client expects.
///
/// `rs://` becomes `tcp://` and `rss://` becomes `tcps://`. The rest of the
/// address is kept byte for byte; anything else is returned unchanged.
pub fn normalize_address(address: &str) -> String {
	if let Some(rest) = address.strip_prefix("rss://") {
		return format!("tcps://{rest}");
	}
	if let Some(rest) = address.strip_prefix("rs://") {
		return format!("tcp://{rest}");
	}
	address.to_string()
}
