//! 商城数据模型
//!
//! 各任务类型对应的结果数据结构；缓存内容与事件载荷均使用这些类型

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::updater::TaskKind;

/// 商城商品
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MallProduct {
    /// 商品ID
    pub product_id: String,
    /// 商品标题
    pub title: String,
    /// 商品价格
    pub price: f64,
    /// 原价（0 表示未知）
    #[serde(default)]
    pub original_price: f64,
    /// 折扣百分比（0 表示无折扣）
    #[serde(default)]
    pub discount: u32,
    /// 销量
    #[serde(default)]
    pub sales_count: u64,
    /// 评分
    #[serde(default)]
    pub rating: f64,
    /// 评价数量
    #[serde(default)]
    pub review_count: u64,
    /// 商品图片URL
    #[serde(default)]
    pub image_url: String,
    /// 店铺名称
    #[serde(default)]
    pub shop_name: String,
    /// 店铺ID
    #[serde(default)]
    pub shop_id: String,
    /// 商品分类
    #[serde(default)]
    pub category: String,
    /// 商品标签
    #[serde(default)]
    pub tags: Vec<String>,
    /// 是否热门商品
    #[serde(default)]
    pub is_trending: bool,
}

/// 店铺信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShopInfo {
    /// 店铺ID
    pub shop_id: String,
    /// 店铺名称
    pub shop_name: String,
    /// 店铺评分
    #[serde(default)]
    pub shop_rating: f64,
}

/// 商品详情
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductDetail {
    /// 商品ID
    pub product_id: String,
    /// 商品标题
    pub title: String,
    /// 商品描述
    #[serde(default)]
    pub description: String,
    /// 商品价格
    pub price: f64,
    /// 原价
    #[serde(default)]
    pub original_price: f64,
    /// 销量
    #[serde(default)]
    pub sales_count: u64,
    /// 评分
    #[serde(default)]
    pub rating: f64,
    /// 评价数量
    #[serde(default)]
    pub review_count: u64,
    /// 店铺信息
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop_info: Option<ShopInfo>,
    /// 商品图片列表
    #[serde(default)]
    pub images: Vec<String>,
    /// 规格参数
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
}

/// 分类统计
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryStat {
    /// 分类名称
    pub name: String,
    /// 商品数量
    pub count: u64,
}

/// 商城分析数据
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MallAnalytics {
    /// 总商品数
    pub total_products: u64,
    /// 总销量
    pub total_sales: u64,
    /// 平均价格
    pub avg_price: f64,
    /// 热门分类
    #[serde(default)]
    pub top_categories: Vec<CategoryStat>,
    /// 价格分布（区间 -> 数量）
    #[serde(default)]
    pub price_distribution: BTreeMap<String, u64>,
    /// 热门关键词
    #[serde(default)]
    pub trending_keywords: Vec<String>,
}

/// 更新结果数据
///
/// 按任务类型打标签的联合类型；数据源返回的标签必须与任务类型一致。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MallData {
    /// 商品列表
    ProductList(Vec<MallProduct>),
    /// 商品详情
    ProductDetail(ProductDetail),
    /// 热门商品
    Trending(Vec<MallProduct>),
    /// 分析数据
    Analytics(MallAnalytics),
}

impl MallData {
    /// 数据对应的任务类型
    pub fn kind(&self) -> TaskKind {
        match self {
            MallData::ProductList(_) => TaskKind::ProductList,
            MallData::ProductDetail(_) => TaskKind::ProductDetail,
            MallData::Trending(_) => TaskKind::Trending,
            MallData::Analytics(_) => TaskKind::Analytics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_product(id: &str) -> MallProduct {
        MallProduct {
            product_id: id.to_string(),
            title: format!("商品 {}", id),
            price: 99.9,
            original_price: 128.0,
            discount: 20,
            sales_count: 1200,
            rating: 4.7,
            review_count: 300,
            image_url: "https://example.com/1.jpg".to_string(),
            shop_name: "精品店铺1".to_string(),
            shop_id: "shop_1001".to_string(),
            category: "美妆".to_string(),
            tags: vec!["热销".to_string()],
            is_trending: true,
        }
    }

    #[test]
    fn test_mall_data_kind() {
        assert_eq!(
            MallData::ProductList(vec![sample_product("p1")]).kind(),
            TaskKind::ProductList
        );
        assert_eq!(
            MallData::Trending(vec![]).kind(),
            TaskKind::Trending
        );
        assert_eq!(
            MallData::Analytics(MallAnalytics::default()).kind(),
            TaskKind::Analytics
        );
    }

    #[test]
    fn test_mall_data_tagged_serialization() {
        let data = MallData::Trending(vec![sample_product("p1")]);
        let json = serde_json::to_value(&data).unwrap();

        assert_eq!(json["type"], "trending");
        assert_eq!(json["data"][0]["product_id"], "p1");

        let restored: MallData = serde_json::from_value(json).unwrap();
        assert_eq!(restored, data);
    }

    /// 缺少可选字段的旧数据应能正确反序列化
    #[test]
    fn test_product_minimal_deserialization() {
        let json = r#"{
            "product_id": "p_001",
            "title": "测试商品",
            "price": 59.0
        }"#;

        let product: MallProduct = serde_json::from_str(json).unwrap();
        assert_eq!(product.product_id, "p_001");
        assert_eq!(product.sales_count, 0);
        assert!(product.tags.is_empty());
        assert!(!product.is_trending);
    }
}
