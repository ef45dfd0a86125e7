pub mod reqwest_pool;
pub mod ureq_pool;

pub use reqwest_pool::ReqwestPool;
pub use ureq_pool::UreqPool;
