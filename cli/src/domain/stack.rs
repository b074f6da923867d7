//! Host and key lookup in cloud stack outputs.
//!
//! The stack provider returns a JSON object of named outputs. Hosts are a
//! list of addresses (or objects carrying one); the SSH key is a string.

use serde_json::Value;

use crate::domain::error::StackError;

/// Object fields probed, in order, for a host entry's address.
pub const ADDRESS_FIELDS: &[&str] = &["host", "ip", "public_ip"];

/// Returns the address of host `index` in the list output `hosts_output`.
///
/// # Errors
///
/// Returns a `StackError` if the outputs are not an object, the output is
/// missing or not a list, the index is out of range, or the entry carries no
/// address.
pub fn select_host(outputs: &Value, hosts_output: &str, index: usize) -> Result<String, StackError> {
    let hosts = output(outputs, hosts_output)?
        .as_array()
        .ok_or_else(|| StackError::NotAList(hosts_output.to_string()))?;
    let entry = hosts.get(index).ok_or(StackError::IndexOutOfRange {
        index,
        count: hosts.len(),
    })?;
    let address = match entry {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => ADDRESS_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_str)),
        _ => None,
    };
    address
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .ok_or(StackError::NoAddress(index))
}

/// Returns the string output `name`.
///
/// # Errors
///
/// Returns a `StackError` if the output is missing or not a string.
pub fn string_output<'a>(outputs: &'a Value, name: &str) -> Result<&'a str, StackError> {
    output(outputs, name)?
        .as_str()
        .ok_or_else(|| StackError::NotAString(name.to_string()))
}

/// Like [`string_output`], but a missing output is `None`.
///
/// # Errors
///
/// Returns `StackError::NotAString` if the output exists with another type.
pub fn optional_string_output<'a>(
    outputs: &'a Value,
    name: &str,
) -> Result<Option<&'a str>, StackError> {
    match outputs.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => string_output(outputs, name).map(Some),
    }
}

fn output<'a>(outputs: &'a Value, name: &str) -> Result<&'a Value, StackError> {
    let map = outputs.as_object().ok_or(StackError::NotAnObject)?;
    map.get(name)
        .ok_or_else(|| StackError::MissingOutput(name.to_string()))
}
