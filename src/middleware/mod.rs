pub mod paging;
pub mod redirect;
pub mod seo;
