// ABOUTME: Job backend implementations (Jenkins, mock).
// ABOUTME: Each backend implements JobServer; Jenkins also implements StatusSource.

pub mod jenkins;
pub mod mock;
