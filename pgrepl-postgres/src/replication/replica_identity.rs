use std::fmt;

use thiserror::Error;
use tokio_postgres::Client;
use tracing::info;

use crate::identifier::TableIdentifier;

/// Errors raised while reading or changing a table's replica identity.
#[derive(Debug, Error)]
pub enum ReplicaIdentityError {
    #[error("error querying replica identity: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("unknown replica identity code `{0}`")]
    UnknownCode(String),
}

/// Replica identity of a table, as stored in `pg_class.relreplident`.
///
/// Decides which columns of the old row logical decoding emits for `UPDATE` and
/// `DELETE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplicaIdentity {
    /// Primary key columns, if any (`d`).
    Default,
    /// No old row information (`n`).
    Nothing,
    /// All columns (`f`).
    Full,
    /// Columns of a chosen unique index (`i`).
    Index,
}

impl ReplicaIdentity {
    /// Maps the single-character catalog code to a [`ReplicaIdentity`].
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'd' => Some(Self::Default),
            'n' => Some(Self::Nothing),
            'f' => Some(Self::Full),
            'i' => Some(Self::Index),
            _ => None,
        }
    }

    /// Returns the single-character catalog code.
    pub fn code(&self) -> char {
        match self {
            Self::Default => 'd',
            Self::Nothing => 'n',
            Self::Full => 'f',
            Self::Index => 'i',
        }
    }

    /// Returns the name used in `ALTER TABLE ... REPLICA IDENTITY`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Nothing => "nothing",
            Self::Full => "full",
            Self::Index => "index",
        }
    }
}

impl fmt::Display for ReplicaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads the replica identity of `table`.
///
/// The table is resolved through a `regclass` cast, so a missing table surfaces as an
/// `undefined_table` error.
pub async fn get_replica_identity(
    client: &Client,
    table: &TableIdentifier,
) -> Result<ReplicaIdentity, ReplicaIdentityError> {
    // `relreplident` is a `"char"`, cast to text to read it as a string.
    let query = "select relreplident::text from pg_class where oid = $1::text::regclass;";

    let row = client
        .query_one(query, &[&table.as_quoted_identifier()])
        .await?;
    let code: String = row.get(0);

    let mut chars = code.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => {
            ReplicaIdentity::from_code(c).ok_or(ReplicaIdentityError::UnknownCode(code))
        }
        _ => Err(ReplicaIdentityError::UnknownCode(code)),
    }
}

/// Returns `true` if the replica identity of `table` is [`ReplicaIdentity::Full`].
pub async fn is_replica_identity_full(
    client: &Client,
    table: &TableIdentifier,
) -> Result<bool, ReplicaIdentityError> {
    let identity = get_replica_identity(client, table).await?;

    Ok(identity == ReplicaIdentity::Full)
}

/// Sets the replica identity of `table` to [`ReplicaIdentity::Full`].
pub async fn set_replica_identity_full(
    client: &Client,
    table: &TableIdentifier,
) -> Result<(), tokio_postgres::Error> {
    let query = format!(
        "alter table {} replica identity full;",
        table.as_quoted_identifier()
    );
    client.batch_execute(&query).await?;

    info!(table = %table, "set replica identity to full");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_catalog_codes() {
        assert_eq!(ReplicaIdentity::from_code('d'), Some(ReplicaIdentity::Default));
        assert_eq!(ReplicaIdentity::from_code('n'), Some(ReplicaIdentity::Nothing));
        assert_eq!(ReplicaIdentity::from_code('f'), Some(ReplicaIdentity::Full));
        assert_eq!(ReplicaIdentity::from_code('i'), Some(ReplicaIdentity::Index));
        assert_eq!(ReplicaIdentity::from_code('x'), None);
    }

    #[test]
    fn codes_and_names_agree() {
        for identity in [
            ReplicaIdentity::Default,
            ReplicaIdentity::Nothing,
            ReplicaIdentity::Full,
            ReplicaIdentity::Index,
        ] {
            assert_eq!(ReplicaIdentity::from_code(identity.code()), Some(identity));
            assert_eq!(
                identity.as_str().chars().next(),
                Some(identity.code()),
                "name and code of {identity:?} should share the first letter"
            );
        }
        assert_eq!(ReplicaIdentity::Full.to_string(), "full");
    }
}
