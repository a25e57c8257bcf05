mod api;
mod content;

pub use api::{
    AuthResponse, ChangePasswordRequest, DataResponse, HealthResponse, LoginRequest,
    MessageResponse, Profile, UserView,
};
pub use content::{
    CreateLanguageRequest, CreateTranslationRequest, Language, StaticContent, Translation,
    UpdateLanguageRequest, UpdateTranslationRequest,
};
