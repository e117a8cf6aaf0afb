pub mod checkpoints;
pub mod health;
pub mod replies;
