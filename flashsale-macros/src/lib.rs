//! flashsale 过程宏
//!
//! - `#[entity]`：为资源结构体追加 `id`/`version` 字段并实现 `Entity`；
//! - `#[entity_id]`：为单字段 tuple struct 生成强类型标识；
//! - `#[value_object]`：为值对象合并常用派生。
//!
//! 生成代码统一通过 `::flashsale_domain` 路径引用领域层类型。
use proc_macro::TokenStream;

mod entity;
mod entity_id;
mod utils;
mod value_object;

/// 实体宏
/// - 追加字段：`id: IdType`, `version: Version`（若缺失）并置于字段最前
/// - 自动实现 `::flashsale_domain::entity::Entity`（`id/version/set_version`）
/// - 参数：`#[entity(id = IdType, debug = true|false)]`，`id` 必填
#[proc_macro_attribute]
pub fn entity(attr: TokenStream, item: TokenStream) -> TokenStream {
    entity::expand(attr, item)
}

/// 实体 ID 宏
///
/// 用于 `struct StockId(i64);`、`struct OrderId(Uuid);` 等单字段包装类型，
/// 生成 `new`、`Display`、`FromStr` 与双向 `From` 转换。
#[proc_macro_attribute]
pub fn entity_id(attr: TokenStream, item: TokenStream) -> TokenStream {
    entity_id::expand(attr, item)
}

/// 值对象宏：合并 Debug/Clone/Default/Serialize/Deserialize/PartialEq/Eq 派生
#[proc_macro_attribute]
pub fn value_object(attr: TokenStream, item: TokenStream) -> TokenStream {
    value_object::expand(attr, item)
}
