//! Backend collections consumed by the admin front end.
//!
//! Every call goes through [`ApiClient`], so it carries the bearer
//! credential and gets the same single refresh-and-retry. Business rules
//! stay on the backend; this module only knows the paths.

use std::fmt::Display;

use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};

use crate::backend::AuthBackend;
use crate::client::ApiClient;
use crate::error::Error;
use crate::transport::PendingRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Administradores,
    Clientes,
    Funcionarios,
    VeiculosEmpresa,
    VeiculosCliente,
    Servicos,
    FimServicos,
    Feedback,
    TiposServico,
}

impl Resource {
    pub const ALL: [Resource; 9] = [
        Resource::Administradores,
        Resource::Clientes,
        Resource::Funcionarios,
        Resource::VeiculosEmpresa,
        Resource::VeiculosCliente,
        Resource::Servicos,
        Resource::FimServicos,
        Resource::Feedback,
        Resource::TiposServico,
    ];

    /// Collection path on the backend.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Administradores => "/administrador",
            Self::Clientes => "/clientes",
            Self::Funcionarios => "/funcionario",
            Self::VeiculosEmpresa => "/veiculoEmpresa",
            Self::VeiculosCliente => "/veiculoCliente",
            Self::Servicos => "/servicos",
            Self::FimServicos => "/fim-servicos",
            Self::Feedback => "/feedback",
            Self::TiposServico => "/tipos-servico",
        }
    }

    /// Path of one member: `/clientes/3`.
    #[must_use]
    pub fn member(self, id: impl Display) -> String {
        self.nested(&[&id.to_string()])
    }

    /// Path below the collection, one encoded segment per entry:
    /// `["cliente-statistics", "4"]` on `FimServicos` is
    /// `/fim-servicos/cliente-statistics/4`.
    #[must_use]
    pub fn nested(self, segments: &[&str]) -> String {
        segments.iter().fold(self.path().to_owned(), |mut path, segment| {
            path.push('/');
            path.push_str(&urlencoding::encode(segment));
            path
        })
    }
}

/// CRUD calls for one [`Resource`].
pub struct ResourceClient<'a, B> {
    api: &'a ApiClient<B>,
    resource: Resource,
}

impl<B: AuthBackend> ApiClient<B> {
    #[must_use]
    pub fn resource(&self, resource: Resource) -> ResourceClient<'_, B> {
        ResourceClient {
            api: self,
            resource,
        }
    }
}

impl<B: AuthBackend> ResourceClient<'_, B> {
    #[must_use]
    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// `GET /<collection>`
    pub async fn list<T: DeserializeOwned>(&self) -> Result<Vec<T>, Error> {
        self.api.get(self.resource.path()).await
    }

    /// `GET /<collection>?k=v...`, e.g. company vehicles by `status`.
    pub async fn list_where<T: DeserializeOwned>(
        &self,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, Error> {
        let request = query
            .iter()
            .fold(PendingRequest::get(self.resource.path()), |req, (k, v)| {
                req.with_query(*k, *v)
            });
        self.api.request(request).await
    }

    /// `GET /<collection>/<id>`
    pub async fn get<T: DeserializeOwned>(&self, id: impl Display) -> Result<T, Error> {
        self.api.get(&self.resource.member(id)).await
    }

    /// `GET /<collection>/<segments...>` for derived views such as
    /// per-client statistics.
    pub async fn fetch<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, Error> {
        self.api.get(&self.resource.nested(segments)).await
    }

    /// `POST /<collection>`
    pub async fn create<T, Body>(&self, body: &Body) -> Result<T, Error>
    where
        T: DeserializeOwned,
        Body: Serialize + ?Sized,
    {
        self.api.post(self.resource.path(), body).await
    }

    /// `PUT /<collection>/<id>`
    pub async fn update<T, Body>(&self, id: impl Display, body: &Body) -> Result<T, Error>
    where
        T: DeserializeOwned,
        Body: Serialize + ?Sized,
    {
        self.api.put(&self.resource.member(id), body).await
    }

    /// `DELETE /<collection>/<id>`. Any response body is ignored.
    pub async fn delete(&self, id: impl Display) -> Result<(), Error> {
        self.api
            .delete::<IgnoredAny>(&self.resource.member(id))
            .await
            .map(|_| ())
    }
}
