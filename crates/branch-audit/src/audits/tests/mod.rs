mod analytics;
mod common;
mod lifecycle;
