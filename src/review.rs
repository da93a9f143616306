use crate::database::MovieDb;
use crate::error::AppError;
use crate::model::{Review, ReviewEntry};
use log::debug;

#[derive(Clone)]
pub struct ReviewService {
    db: sled::Db,
}

impl ReviewService {
    pub fn new(db: sled::Db) -> Self {
        ReviewService { db }
    }

    pub fn add_review(
        &self,
        movie_id: u64,
        username: &str,
        content: &str,
    ) -> Result<(), AppError> {
        let review = Review {
            username: username.to_owned(),
            content: content.to_owned(),
        };
        if self.db.append_review(movie_id, &review)? {
            debug!("{} reviewed movie {}", username, movie_id);
            Ok(())
        } else {
            Err(AppError::NotFound("Movie"))
        }
    }

    pub fn list_reviews(&self) -> Result<Vec<ReviewEntry>, AppError> {
        Ok(self
            .db
            .list_movies()?
            .into_iter()
            .flat_map(|entry| {
                let movie_id = entry.id;
                entry
                    .movie
                    .reviews
                    .into_iter()
                    .map(move |review| ReviewEntry { movie_id, review })
            })
            .collect())
    }
}
