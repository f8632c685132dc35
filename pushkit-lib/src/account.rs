//! CAIP-10 account identifiers (`namespace:reference:address`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A string that is not a valid CAIP-10 account.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid account '{0}': expected namespace:reference:address")]
pub struct InvalidAccount(pub String);

/// A blockchain account such as `eip155:1:0xab16a96d359ec26a11e2c2b3d8f8b8942d5bfcdb`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Account(String);

impl Account {
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidAccount> {
        let value = value.into();
        if is_valid(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidAccount(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn namespace(&self) -> &str {
        self.parts().0
    }

    pub fn reference(&self) -> &str {
        self.parts().1
    }

    pub fn address(&self) -> &str {
        self.parts().2
    }

    /// CAIP-2 chain id, `namespace:reference`.
    pub fn blockchain_identifier(&self) -> String {
        format!("{}:{}", self.namespace(), self.reference())
    }

    fn parts(&self) -> (&str, &str, &str) {
        let mut it = self.0.splitn(3, ':');
        let namespace = it.next().unwrap_or_default();
        let reference = it.next().unwrap_or_default();
        let address = it.next().unwrap_or_default();
        (namespace, reference, address)
    }
}

fn is_valid(value: &str) -> bool {
    let parts: Vec<&str> = value.split(':').collect();
    let [namespace, reference, address] = parts.as_slice() else {
        return false;
    };

    let namespace_ok = (3..=8).contains(&namespace.len())
        && namespace
            .bytes()
            .all(|b| b == b'-' || b.is_ascii_lowercase() || b.is_ascii_digit());
    let reference_ok = (1..=32).contains(&reference.len())
        && reference
            .bytes()
            .all(|b| b == b'-' || b == b'_' || b.is_ascii_alphanumeric());
    let address_ok = (1..=128).contains(&address.len())
        && address
            .bytes()
            .all(|b| b == b'-' || b == b'.' || b == b'%' || b.is_ascii_alphanumeric());

    namespace_ok && reference_ok && address_ok
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Account({})", self.0)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Account {
    type Err = InvalidAccount;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Account {
    type Error = InvalidAccount;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Account> for String {
    fn from(account: Account) -> Self {
        account.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let account: Account = "eip155:1:0xab16a96d359ec26a11e2c2b3d8f8b8942d5bfcdb"
            .parse()
            .unwrap();
        assert_eq!(account.namespace(), "eip155");
        assert_eq!(account.reference(), "1");
        assert_eq!(account.blockchain_identifier(), "eip155:1");
        assert!(account.address().starts_with("0xab16"));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Account::new("eip155:1").is_err());
        assert!(Account::new("EIP155:1:0xabc").is_err());
        assert!(Account::new("eip155:1:0xabc:extra").is_err());
        assert!(Account::new("ab:1:0xabc").is_err());
        assert!(Account::new("").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let account = Account::new("solana:4sGjMW1sUnHzSxGspuhpqLDx6wiyjNtZ:GyWgeqpy").unwrap();
        let json = serde_json::to_string(&account).unwrap();
        assert_eq!(json, "\"solana:4sGjMW1sUnHzSxGspuhpqLDx6wiyjNtZ:GyWgeqpy\"");
        assert!(serde_json::from_str::<Account>("\"nope\"").is_err());
    }
}
