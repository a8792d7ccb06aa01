use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// 연결 하나에 묶인 상태. 이름 붙은 결과(핸들)를 보관한다.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    //     handle,  row positions
    handles: Mutex<HashMap<Box<str>, Vec<usize>>>,
}

impl Session {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn bind(&self, handle: &str, positions: Vec<usize>) {
        self.handles.lock().insert(handle.into(), positions);
    }

    pub fn resolve(&self, handle: &str) -> Option<Vec<usize>> {
        self.handles.lock().get(handle).cloned()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bind_and_resolve() {
        let session = Session::new(ConnectionId(3));
        assert_eq!(session.resolve("s1"), None);
        session.bind("s1", vec![0, 2]);
        assert_eq!(session.resolve("s1"), Some(vec![0, 2]));
        // 같은 이름이면 덮어쓴다
        session.bind("s1", vec![5]);
        assert_eq!(session.resolve("s1"), Some(vec![5]));
        assert_eq!(session.id().to_string(), "conn#3");
    }
}
