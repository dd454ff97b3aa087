use poem_openapi::Object;

#[derive(Object)]
pub struct OkResponseDto {
    pub data: bool,
}
