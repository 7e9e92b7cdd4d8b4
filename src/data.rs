pub mod valuations;
