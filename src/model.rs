use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct User {
    pub username: String,
    pub password_hash: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub username: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Movie {
    pub title: String,
    pub description: String,
    pub poster_path: String,
    pub reviews: Vec<Review>,
}

/// A movie together with the id the catalog assigned to it.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MovieEntry {
    pub id: u64,
    #[serde(flatten)]
    pub movie: Movie,
}

/// A review as listed across the whole catalog.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ReviewEntry {
    pub movie_id: u64,
    #[serde(flatten)]
    pub review: Review,
}

impl Movie {
    fn new(title: &str, description: &str, poster_path: &str) -> Self {
        Movie {
            title: title.to_owned(),
            description: description.to_owned(),
            poster_path: poster_path.to_owned(),
            reviews: Vec::new(),
        }
    }
}

pub fn sample_movies() -> Vec<Movie> {
    vec![
        Movie::new(
            "Inception",
            "A thief who steals corporate secrets through the use of dream-sharing technology.",
            "./images/inception.jpg",
        ),
        Movie::new(
            "The Dark Knight",
            "Batman must accept one of the greatest psychological and physical tests of his ability to fight injustice.",
            "./images/dark_knight.jpg",
        ),
        Movie::new(
            "Interstellar",
            "A team of explorers travel through a wormhole in space in an attempt to ensure humanity's survival.",
            "./images/interstellar.jpg",
        ),
        Movie::new(
            "The Matrix",
            "A computer hacker learns from mysterious rebels about the true nature of his reality and his role in the war against its controllers.",
            "./images/matrix.jpg",
        ),
        Movie::new(
            "Fight Club",
            "An insomniac office worker and a devil-may-care soap maker form an underground fight club.",
            "./images/fight_club.jpg",
        ),
    ]
}
