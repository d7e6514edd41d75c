// Venue adapters: the swap module capability contract and the reference
// constant-product and stable-pool implementations
//

pub mod adapter;
pub mod amm;
pub mod stable;

pub use adapter::{fee_complement, ModuleContext, ModuleContract, PoolBook, SwapCall, SwapModule};
pub use amm::ConstantProductModule;
pub use stable::StablePoolModule;
