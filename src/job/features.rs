//! 服务端已知的功能类型。
//!
//! 客户端不强制校验功能类型，未知值原样提交，由服务端决定是否接受。

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feature {
    pub id: &'static str,
    pub title: &'static str,
    /// 参数示例，空对象表示该功能不需要参数。
    pub params_hint: &'static str,
}

pub const FEATURES: &[Feature] = &[
    Feature {
        id: "enhance",
        title: "智能修图增强",
        params_hint: "{}",
    },
    Feature {
        id: "figurine",
        title: "插画转手办",
        params_hint: "{}",
    },
    Feature {
        id: "era_style",
        title: "时代风格转换",
        params_hint: r#"{"era":"1970s"}"#,
    },
    Feature {
        id: "hairstyle_grid",
        title: "发型九宫格",
        params_hint: "{}",
    },
    Feature {
        id: "old_photo_restore",
        title: "老照片修复上色",
        params_hint: "{}",
    },
    Feature {
        id: "id_photo",
        title: "证件照制作",
        params_hint: r#"{"background":"blue"}"#,
    },
];

pub fn find_feature(id: &str) -> Option<&'static Feature> {
    FEATURES.iter().find(|f| f.id == id)
}
