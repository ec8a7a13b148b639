pub mod inspect;
pub mod noise;
pub mod sample;
pub mod schedulers;
