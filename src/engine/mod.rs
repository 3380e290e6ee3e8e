pub mod key_path;
pub mod resolver;
pub mod session;
pub mod template;

pub use key_path::KeyPath;
pub use resolver::Resolver;
pub use session::{Session, SessionCache};
pub use template::Facts;
