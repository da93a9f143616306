use crate::database::UserDb;
use crate::error::AppError;
use crate::model::User;
use log::debug;

/// Registration and password verification on top of the credential trees.
///
/// Hashing is deliberately slow; callers on an async executor should run
/// these methods on a blocking thread.
#[derive(Clone)]
pub struct AuthService {
    db: sled::Db,
    cost: u32,
    // Verified against when the username is unknown, so that a miss costs
    // as much as a wrong password.
    dummy_hash: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Authenticated {
    pub user_id: u64,
}

impl AuthService {
    pub fn new(db: sled::Db, cost: u32) -> Result<Self, AppError> {
        let dummy_hash = bcrypt::hash("correct horse battery staple", cost)?;
        Ok(AuthService {
            db,
            cost,
            dummy_hash,
        })
    }

    pub fn register(&self, username: &str, password: &str) -> Result<u64, AppError> {
        let user = User {
            username: username.to_owned(),
            password_hash: bcrypt::hash(password, self.cost)?,
        };
        match self.db.add_user(&user)? {
            Some(id) => {
                debug!("registered user {} with id {}", username, id);
                Ok(id)
            }
            None => Err(AppError::UsernameTaken(user.username)),
        }
    }

    pub fn login(&self, username: &str, password: &str) -> Result<Authenticated, AppError> {
        let stored = self.db.get_user_by_username(username)?;
        let hash = match &stored {
            Some((_, user)) => user.password_hash.as_str(),
            None => self.dummy_hash.as_str(),
        };
        let verified = bcrypt::verify(password, hash)?;
        match stored {
            Some((user_id, _)) if verified => Ok(Authenticated { user_id }),
            _ => Err(AppError::InvalidCredentials),
        }
    }
}
