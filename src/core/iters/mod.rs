mod strider;

pub use strider::Strider;
