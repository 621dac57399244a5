pub use crate::openai::list_response_items::types::ResponseItemList as ListInputItemsResponse;
