pub mod entities;

pub mod errors {
    use dxfdoc_core::document::EntityId;
    use thiserror::Error;

    /// 错误分类：调用方传入了不合法的参数，或引用了不存在的命名对象。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ErrorKind {
        InvalidArgument,
        NotFound,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum EntitiesError {
        #[error("the layout {0:?} does not exist")]
        LayoutNotFound(String),
        #[error("entity {0} already belongs to a document, clone it instead")]
        AlreadyOwned(EntityId),
        #[error("entity {0} not found in the document")]
        EntityNotFound(EntityId),
        #[error("entity sequence is missing")]
        MissingEntities,
    }

    impl EntitiesError {
        pub fn kind(&self) -> ErrorKind {
            match self {
                EntitiesError::LayoutNotFound(_) => ErrorKind::NotFound,
                EntitiesError::AlreadyOwned(_)
                | EntitiesError::EntityNotFound(_)
                | EntitiesError::MissingEntities => ErrorKind::InvalidArgument,
            }
        }
    }
}
