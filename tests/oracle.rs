use tokio::{net::TcpListener, task};
use valuerpc::{
    backends::oracle::{Oracle, OracleTable},
    Call, CallError, Client, ClientError, Server, Value,
};

#[tokio::test]
async fn eval_and_update() {
    let table = OracleTable::default().with_response("allowed", Value::from(1));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    task::spawn(Server::new(Oracle::new(table)).serve(listener));

    let mut client = Client::connect(addr).await.unwrap();
    let calls = vec![
        Call::new("allowed", vec![Value::from("alice")]),
        Call::new("anything", vec![]),
    ];
    let values = client.eval(calls.clone()).await.unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values[0], Value::Int64(1));
    assert_eq!(
        values[1],
        Value::List(vec![Value::Float64(3.141), Value::from("that worked")])
    );

    client.update(calls).await.unwrap();
    client.ping().await.unwrap();
}

#[tokio::test]
async fn empty_table_rejects() {
    let table = OracleTable {
        responses: Default::default(),
        fallback: None,
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    task::spawn(Server::new(Oracle::new(table)).serve(listener));

    let mut client = Client::connect(addr).await.unwrap();
    let err = client.call("x", vec![]).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Call(CallError::UnknownOperation { ref name }) if name == "x"
    ));
    assert_eq!(client.eval(vec![]).await.unwrap(), Vec::<Value>::new());
}
