use crate::model::*;
use sled::transaction::{
    abort, ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    Transactional,
};
use std::convert::TryInto;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),

    #[error("encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("corrupt record in {0}")]
    Corrupt(&'static str),
}

impl From<TransactionError<StoreError>> for StoreError {
    fn from(err: TransactionError<StoreError>) -> Self {
        match err {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => StoreError::Sled(err),
        }
    }
}

// Big-endian so that the key order of a tree is the id order.
fn serialize_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V, tree: &'static str) -> Result<u64, StoreError> {
    let bytes = id.as_ref().try_into().map_err(|_| StoreError::Corrupt(tree))?;
    Ok(u64::from_be_bytes(bytes))
}

// Assigns ids up front so that a batch keeps its order in the tree.
fn encode_movies(
    db: &sled::Db,
    movies: &[Movie],
) -> Result<Vec<([u8; 8], Vec<u8>)>, StoreError> {
    movies
        .iter()
        .map(|movie| -> Result<_, StoreError> {
            Ok((serialize_id(db.generate_id()?), bincode::serialize(movie)?))
        })
        .collect()
}

fn abort_codec(err: bincode::Error) -> ConflictableTransactionError<StoreError> {
    ConflictableTransactionError::Abort(err.into())
}

pub trait UserDb {
    type Error;
    /// Returns `None` if the username is already taken.
    fn add_user(&self, user: &User) -> Result<Option<u64>, Self::Error>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<(u64, User)>, Self::Error>;
}

pub trait MovieDb {
    type Error;
    // No route writes or reads a single movie; the review path goes through
    // `append_review` and seeding through `seed_movies`.
    #[cfg_attr(not(test), allow(dead_code))]
    fn insert_movies(&self, movies: &[Movie]) -> Result<Vec<u64>, Self::Error>;
    #[cfg_attr(not(test), allow(dead_code))]
    fn get_movie(&self, id: u64) -> Result<Option<Movie>, Self::Error>;
    #[cfg_attr(not(test), allow(dead_code))]
    fn save_movie(&self, id: u64, movie: &Movie) -> Result<(), Self::Error>;
    fn list_movies(&self) -> Result<Vec<MovieEntry>, Self::Error>;
    /// Appends to the review list of a movie in one transaction. Returns
    /// `false` without writing anything if there is no movie with this id.
    fn append_review(&self, id: u64, review: &Review) -> Result<bool, Self::Error>;
    /// Inserts the movies unless the catalog has been seeded before, in which
    /// case `None` is returned and nothing is written.
    fn seed_movies(&self, movies: &[Movie]) -> Result<Option<Vec<u64>>, Self::Error>;
}

const USERS: &[u8] = b"users";
const USERS_USERNAME: &[u8] = b"users_username";
const MOVIES: &[u8] = b"movies";
const CATALOG_META: &[u8] = b"catalog_meta";
const SEEDED: &[u8] = b"seeded";

impl UserDb for sled::Db {
    type Error = StoreError;

    fn add_user(&self, user: &User) -> Result<Option<u64>, StoreError> {
        let users = self.open_tree(USERS)?;
        let users_username = self.open_tree(USERS_USERNAME)?;
        let id = self.generate_id()?;
        let key = serialize_id(id);
        let encoded = bincode::serialize(user)?;
        let result = (&users, &users_username).transaction(
            |(users, users_username)| -> ConflictableTransactionResult<(), ()> {
                if users_username.get(user.username.as_bytes())?.is_some() {
                    return abort(());
                }
                users.insert(&key[..], encoded.as_slice())?;
                users_username.insert(user.username.as_bytes(), &key[..])?;
                Ok(())
            },
        );
        match result {
            Ok(()) => Ok(Some(id)),
            Err(TransactionError::Abort(())) => Ok(None),
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<(u64, User)>, StoreError> {
        let users_username = self.open_tree(USERS_USERNAME)?;
        let users = self.open_tree(USERS)?;
        if let Some(id) = users_username.get(username.as_bytes())? {
            let raw = users.get(&id)?.ok_or(StoreError::Corrupt("users_username"))?;
            let user = bincode::deserialize(&raw)?;
            Ok(Some((deserialize_id(id, "users_username")?, user)))
        } else {
            Ok(None)
        }
    }
}

impl MovieDb for sled::Db {
    type Error = StoreError;

    fn insert_movies(&self, movies: &[Movie]) -> Result<Vec<u64>, StoreError> {
        let tree = self.open_tree(MOVIES)?;
        let records = encode_movies(self, movies)?;
        let mut batch = sled::Batch::default();
        for (key, encoded) in &records {
            batch.insert(&key[..], encoded.as_slice());
        }
        tree.apply_batch(batch)?;
        Ok(records.iter().map(|(key, _)| u64::from_be_bytes(*key)).collect())
    }

    fn get_movie(&self, id: u64) -> Result<Option<Movie>, StoreError> {
        let movies = self.open_tree(MOVIES)?;
        match movies.get(serialize_id(id))? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    fn save_movie(&self, id: u64, movie: &Movie) -> Result<(), StoreError> {
        let movies = self.open_tree(MOVIES)?;
        movies.insert(&serialize_id(id)[..], bincode::serialize(movie)?)?;
        Ok(())
    }

    fn list_movies(&self) -> Result<Vec<MovieEntry>, StoreError> {
        let movies = self.open_tree(MOVIES)?;
        movies
            .iter()
            .map(|entry| {
                let (key, raw) = entry?;
                Ok(MovieEntry {
                    id: deserialize_id(key, "movies")?,
                    movie: bincode::deserialize(&raw)?,
                })
            })
            .collect()
    }

    fn append_review(&self, id: u64, review: &Review) -> Result<bool, StoreError> {
        let movies = self.open_tree(MOVIES)?;
        let key = serialize_id(id);
        let appended = movies.transaction(
            |movies| -> ConflictableTransactionResult<bool, StoreError> {
                let raw = match movies.get(&key[..])? {
                    Some(raw) => raw,
                    None => return Ok(false),
                };
                let mut movie: Movie = bincode::deserialize(&raw).map_err(abort_codec)?;
                movie.reviews.push(review.clone());
                let encoded = bincode::serialize(&movie).map_err(abort_codec)?;
                movies.insert(&key[..], encoded)?;
                Ok(true)
            },
        )?;
        Ok(appended)
    }

    fn seed_movies(&self, movies: &[Movie]) -> Result<Option<Vec<u64>>, StoreError> {
        let tree = self.open_tree(MOVIES)?;
        let meta = self.open_tree(CATALOG_META)?;
        let records = encode_movies(self, movies)?;
        let result = (&tree, &meta).transaction(
            |(tree, meta)| -> ConflictableTransactionResult<(), ()> {
                if meta.insert(SEEDED, &b"1"[..])?.is_some() {
                    return abort(());
                }
                for (key, encoded) in &records {
                    tree.insert(&key[..], encoded.as_slice())?;
                }
                Ok(())
            },
        );
        match result {
            Ok(()) => Ok(Some(
                records
                    .iter()
                    .map(|(key, _)| u64::from_be_bytes(*key))
                    .collect(),
            )),
            Err(TransactionError::Abort(())) => Ok(None),
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn temporary_db() -> sled::Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    fn user(username: &str) -> User {
        User {
            username: username.to_owned(),
            password_hash: "not-a-real-hash".to_owned(),
        }
    }

    fn review(username: &str, content: &str) -> Review {
        Review {
            username: username.to_owned(),
            content: content.to_owned(),
        }
    }

    #[test]
    fn add_user_rejects_taken_username() {
        let db = temporary_db();
        let id = db.add_user(&user("alice")).unwrap().unwrap();
        assert_eq!(db.add_user(&user("alice")).unwrap(), None);

        let (found_id, found) = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(found_id, id);
        assert_eq!(found.username, "alice");
        assert!(db.get_user_by_username("bob").unwrap().is_none());
    }

    #[test]
    fn movies_are_listed_in_insertion_order() {
        let db = temporary_db();
        let ids = db.insert_movies(&sample_movies()).unwrap();
        assert_eq!(ids.len(), 5);

        let listed = db.list_movies().unwrap();
        let titles: Vec<_> = listed.iter().map(|e| e.movie.title.as_str()).collect();
        assert_eq!(
            titles,
            ["Inception", "The Dark Knight", "Interstellar", "The Matrix", "Fight Club"]
        );
        assert_eq!(listed.iter().map(|e| e.id).collect::<Vec<_>>(), ids);
        assert_eq!(db.list_movies().unwrap(), listed);
    }

    #[test]
    fn save_movie_overwrites_document() {
        let db = temporary_db();
        let id = db.insert_movies(&sample_movies()[..1]).unwrap()[0];
        let mut movie = db.get_movie(id).unwrap().unwrap();
        movie.description = "Dreams within dreams.".to_owned();
        db.save_movie(id, &movie).unwrap();
        assert_eq!(db.get_movie(id).unwrap().unwrap(), movie);
    }

    #[test]
    fn append_review_to_missing_movie_writes_nothing() {
        let db = temporary_db();
        db.insert_movies(&sample_movies()).unwrap();
        let before = db.list_movies().unwrap();

        assert!(!db.append_review(u64::MAX, &review("alice", "great")).unwrap());
        assert!(db.get_movie(u64::MAX).unwrap().is_none());
        assert_eq!(db.list_movies().unwrap(), before);
    }

    #[test]
    fn concurrent_appends_are_all_kept() {
        let db = Arc::new(temporary_db());
        let id = db.insert_movies(&sample_movies()[..1]).unwrap()[0];

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let db = Arc::clone(&db);
                thread::spawn(move || {
                    assert!(db
                        .append_review(id, &review("alice", &format!("review {}", i)))
                        .unwrap());
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let movie = db.get_movie(id).unwrap().unwrap();
        assert_eq!(movie.reviews.len(), 16);
        for i in 0..16 {
            let content = format!("review {}", i);
            assert!(movie.reviews.iter().any(|r| r.content == content));
        }
    }

    #[test]
    fn seeding_happens_once() {
        let db = temporary_db();
        let ids = db.seed_movies(&sample_movies()).unwrap().unwrap();
        assert_eq!(db.seed_movies(&sample_movies()).unwrap(), None);

        let listed = db.list_movies().unwrap();
        assert_eq!(listed.len(), 5);
        assert_eq!(listed.iter().map(|e| e.id).collect::<Vec<_>>(), ids);
    }
}
