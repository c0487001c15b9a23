mod documents;

pub use documents::{
    document_context, document_list, format_context, format_document_list, DocumentContextTool,
    DocumentToolError, ListDocumentsArgs, ListDocumentsTool, SearchArgs, SearchDocumentsTool,
    NO_DOCUMENTS, NO_RESULTS, QUERY_REQUIRED,
};
