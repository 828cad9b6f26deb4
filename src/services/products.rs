use crate::api::types::Product;
use crate::api::{ApiResult, RequestDescriptor};
use crate::cache::Tag;
use crate::query::{QueryApi, QueryEndpoint, QueryOptions, QuerySubscription};

use super::ListParams;

const PRODUCTS_PATH: &str = "/v1/products/";

pub struct ListProducts;

impl QueryEndpoint for ListProducts {
  const NAME: &'static str = "getProducts";
  type Arg = ListParams;
  type Output = Vec<Product>;

  fn request(arg: &Self::Arg) -> ApiResult<RequestDescriptor> {
    Ok(arg.apply(RequestDescriptor::get(PRODUCTS_PATH)))
  }

  fn provides_tags(_arg: &Self::Arg) -> Vec<Tag> {
    vec![Tag::Products]
  }
}

pub struct GetProduct;

impl QueryEndpoint for GetProduct {
  const NAME: &'static str = "getProduct";
  type Arg = String;
  type Output = Product;

  fn request(id: &Self::Arg) -> ApiResult<RequestDescriptor> {
    Ok(RequestDescriptor::get(format!("{}{}/", PRODUCTS_PATH, id)))
  }

  fn provides_tags(_id: &Self::Arg) -> Vec<Tag> {
    vec![Tag::Products]
  }
}

/// Read-only product catalogue.
#[derive(Clone)]
pub struct ProductService {
  api: QueryApi,
}

impl ProductService {
  pub fn new(api: QueryApi) -> Self {
    Self { api }
  }

  pub async fn list(&self, params: ListParams) -> ApiResult<Vec<Product>> {
    self.api.fetch::<ListProducts>(params).await
  }

  pub fn watch_list(
    &self,
    params: ListParams,
    options: QueryOptions,
  ) -> ApiResult<QuerySubscription<Vec<Product>>> {
    self.api.query::<ListProducts>(params, options)
  }

  pub async fn get(&self, id: &str) -> ApiResult<Product> {
    self.api.fetch::<GetProduct>(id.to_string()).await
  }
}
