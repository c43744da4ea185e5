//! Puskesmas master data and user accounts.

use chrono::Utc;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

use super::{scope_clause, Store, StoreError};
use crate::auth::{AccessFilter, RoleCode};
use crate::webhook::FacilityRef;

/// A community health centre.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Puskesmas {
    pub id: String,
    pub code: String,
    pub name: String,
    pub wilayah_id: Option<String>,
}

/// A stored account, including its password hash.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role_code: RoleCode,
    pub puskesmas_id: Option<String>,
    pub wilayah_id: Option<String>,
    pub is_active: bool,
}

/// Account fields safe to return over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role_code: RoleCode,
    pub puskesmas_id: Option<String>,
    pub wilayah_id: Option<String>,
    pub is_active: bool,
}

impl From<UserRecord> for UserSummary {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role_code: user.role_code,
            puskesmas_id: user.puskesmas_id,
            wilayah_id: user.wilayah_id,
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role_code: RoleCode,
    pub puskesmas_id: Option<String>,
    pub wilayah_id: Option<String>,
}

const USER_COLUMNS: &str =
    "u.id, u.email, u.name, u.password_hash, u.role_code, u.puskesmas_id, u.wilayah_id, u.is_active";

/// Raw row; the role code is parsed after the row is read.
struct UserRow {
    id: String,
    email: String,
    name: String,
    password_hash: String,
    role_code: String,
    puskesmas_id: Option<String>,
    wilayah_id: Option<String>,
    is_active: bool,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            password_hash: row.get(3)?,
            role_code: row.get(4)?,
            puskesmas_id: row.get(5)?,
            wilayah_id: row.get(6)?,
            is_active: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<UserRecord, StoreError> {
        let role_code = self
            .role_code
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("user {}: {}", self.id, e)))?;
        Ok(UserRecord {
            id: self.id,
            email: self.email,
            name: self.name,
            password_hash: self.password_hash,
            role_code,
            puskesmas_id: self.puskesmas_id,
            wilayah_id: self.wilayah_id,
            is_active: self.is_active,
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

impl Store {
    pub fn insert_puskesmas(
        &self,
        code: &str,
        name: &str,
        wilayah_id: Option<&str>,
    ) -> Result<Puskesmas, StoreError> {
        let puskesmas = Puskesmas {
            id: Uuid::new_v4().to_string(),
            code: code.trim().to_string(),
            name: name.trim().to_string(),
            wilayah_id: wilayah_id.map(String::from),
        };

        self.lock()?.execute(
            "INSERT INTO puskesmas (id, code, name, wilayah_id) VALUES (?1, ?2, ?3, ?4)",
            params![puskesmas.id, puskesmas.code, puskesmas.name, puskesmas.wilayah_id],
        )?;

        Ok(puskesmas)
    }

    /// Look up a puskesmas by internal id or external code.
    pub fn find_puskesmas(&self, facility: &FacilityRef) -> Result<Option<Puskesmas>, StoreError> {
        let (sql, key) = match facility {
            FacilityRef::Id(id) => ("SELECT id, code, name, wilayah_id FROM puskesmas WHERE id = ?1", id),
            FacilityRef::Code(code) => (
                "SELECT id, code, name, wilayah_id FROM puskesmas WHERE code = ?1",
                code,
            ),
        };

        let conn = self.lock()?;
        let found = conn
            .query_row(sql, [key], |row| {
                Ok(Puskesmas {
                    id: row.get(0)?,
                    code: row.get(1)?,
                    name: row.get(2)?,
                    wilayah_id: row.get(3)?,
                })
            })
            .optional()?;
        Ok(found)
    }

    /// Create an account. A user bound to a puskesmas inherits its wilayah
    /// unless one is given.
    pub fn create_user(&self, new: NewUser) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let conn = self.lock()?;

        let wilayah_id = match (&new.wilayah_id, &new.puskesmas_id) {
            (Some(w), _) => Some(w.clone()),
            (None, Some(pkm)) => conn
                .query_row(
                    "SELECT wilayah_id FROM puskesmas WHERE id = ?1",
                    [pkm],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()?
                .flatten(),
            (None, None) => None,
        };

        conn.execute(
            "INSERT INTO users (id, email, name, password_hash, role_code, puskesmas_id, wilayah_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                normalize_email(&new.email),
                new.name,
                new.password_hash,
                new.role_code.as_str(),
                new.puskesmas_id,
                wilayah_id,
            ],
        )?;

        Ok(id)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("SELECT {} FROM users u WHERE u.email = ?1", USER_COLUMNS);
        let row = self
            .lock()?
            .query_row(&sql, [normalize_email(email)], UserRow::from_row)
            .optional()?;
        row.map(UserRow::into_record).transpose()
    }

    pub fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("SELECT {} FROM users u WHERE u.id = ?1", USER_COLUMNS);
        let row = self
            .lock()?
            .query_row(&sql, [id], UserRow::from_row)
            .optional()?;
        row.map(UserRow::into_record).transpose()
    }

    pub fn touch_last_login(&self, id: &str) -> Result<(), StoreError> {
        self.lock()?.execute(
            "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }

    /// Users within `filter` whose role rank is at least `min_rank`
    /// (i.e. at or below the caller in the hierarchy).
    pub fn list_users(
        &self,
        filter: &AccessFilter,
        min_rank: u8,
    ) -> Result<Vec<UserSummary>, StoreError> {
        let (scope, scope_params) = scope_clause(filter, "u.puskesmas_id", "u.wilayah_id");
        let sql = format!(
            "SELECT {} FROM users u WHERE {} ORDER BY u.email",
            USER_COLUMNS, scope
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(scope_params.iter()), UserRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            let user = row.into_record()?;
            if user.role_code.rank() >= min_rank {
                users.push(user.into());
            }
        }
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::seeded;

    fn new_user(email: &str, role: RoleCode, puskesmas_id: Option<&str>) -> NewUser {
        NewUser {
            email: email.into(),
            name: "Test".into(),
            password_hash: "$argon2id$stub".into(),
            role_code: role,
            puskesmas_id: puskesmas_id.map(String::from),
            wilayah_id: None,
        }
    }

    #[test]
    fn test_find_puskesmas_by_id_and_code() {
        let (store, a, _) = seeded();
        let by_id = store.find_puskesmas(&FacilityRef::Id(a.id.clone())).unwrap();
        let by_code = store.find_puskesmas(&FacilityRef::Code("PKM-SKM".into())).unwrap();
        assert_eq!(by_id, Some(a.clone()));
        assert_eq!(by_code, Some(a));
        assert!(store
            .find_puskesmas(&FacilityRef::Code("PKM-NONE".into()))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_duplicate_puskesmas_code_rejected() {
        let (store, _, _) = seeded();
        assert!(store.insert_puskesmas("PKM-SKM", "Again", None).is_err());
    }

    #[test]
    fn test_create_and_find_user() {
        let (store, a, _) = seeded();
        let id = store
            .create_user(new_user("Staf@PKM.go.id ", RoleCode::StaffPuskesmas, Some(&a.id)))
            .unwrap();

        let user = store.find_user_by_email("staf@pkm.go.id").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role_code, RoleCode::StaffPuskesmas);
        assert_eq!(user.wilayah_id.as_deref(), Some("wil-utara"));
        assert!(user.is_active);

        let same = store.find_user_by_id(&id).unwrap().unwrap();
        assert_eq!(same.email, "staf@pkm.go.id");

        store.touch_last_login(&id).unwrap();
    }

    #[test]
    fn test_corrupt_role_is_error() {
        let (store, _, _) = seeded();
        let id = store
            .create_user(new_user("x@dinkes.go.id", RoleCode::StaffDinas, None))
            .unwrap();
        store
            .lock()
            .unwrap()
            .execute("UPDATE users SET role_code = 'DOKTER' WHERE id = ?1", [&id])
            .unwrap();
        assert!(matches!(
            store.find_user_by_id(&id),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_list_users_scoped_and_ranked() {
        let (store, a, b) = seeded();
        store.create_user(new_user("kadis@dinkes.go.id", RoleCode::KepalaDinas, None)).unwrap();
        store
            .create_user(new_user("kapus-a@pkm.go.id", RoleCode::KepalaPuskesmas, Some(&a.id)))
            .unwrap();
        store
            .create_user(new_user("staf-a@pkm.go.id", RoleCode::StaffPuskesmas, Some(&a.id)))
            .unwrap();
        store
            .create_user(new_user("staf-b@pkm.go.id", RoleCode::StaffPuskesmas, Some(&b.id)))
            .unwrap();

        let all = store.list_users(&AccessFilter::default(), 1).unwrap();
        assert_eq!(all.len(), 4);

        let filter = AccessFilter {
            puskesmas_id: Some(a.id.clone()),
            wilayah_id: a.wilayah_id.clone(),
        };
        let scoped = store
            .list_users(&filter, RoleCode::KepalaPuskesmas.rank())
            .unwrap();
        let emails: Vec<_> = scoped.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["kapus-a@pkm.go.id", "staf-a@pkm.go.id"]);
    }
}
