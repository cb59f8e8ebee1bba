//! Reply-to addressing. Every conversation email is sent from
//! `replytomessage<N>@<domain>` where N is the id of the message it
//! carries, so a reply can be routed back to that message.

use regex::Regex;

pub fn reply_address(message_id: i64, domain: &str) -> String {
    format!("replytomessage{}@{}", message_id, domain)
}

/// Extract the message id from a reply address for `domain`.
pub fn parse_reply_address(address: &str, domain: &str) -> Option<i64> {
    let pattern = format!(r"^replytomessage([0-9]+)@{}$", regex::escape(domain));
    let re = Regex::new(&pattern).ok()?;
    let captures = re.captures(address.trim())?;
    captures.get(1)?.as_str().parse().ok()
}
