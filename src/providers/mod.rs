pub mod jenkins;

pub use jenkins::JenkinsProvider;
