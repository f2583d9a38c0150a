mod proj;

pub use proj::EqualAreaProjection;
